pub mod csv_session_sink;
