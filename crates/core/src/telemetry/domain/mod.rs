pub mod frame_record;
