pub mod config;
pub mod constants;
pub mod face_box;
pub mod frame;
pub mod gray_frame;
pub mod motion_transform;
pub mod timing;
pub mod video_metadata;
