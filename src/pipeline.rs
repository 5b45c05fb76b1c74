pub mod context;
pub mod shaders;
pub mod shadow;
pub mod state;
