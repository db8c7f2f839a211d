// Capture: camera lifecycle and crop generation.

pub mod camera;
pub mod crop;
