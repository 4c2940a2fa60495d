pub mod faults;
pub mod frame_io;
pub mod intensity;
pub mod metadata;
pub mod registry;
