pub mod canvas;
pub mod recorder;
pub mod skeleton;
pub mod surface;

pub use canvas::*;
pub use recorder::*;
pub use skeleton::*;
pub use surface::*;
