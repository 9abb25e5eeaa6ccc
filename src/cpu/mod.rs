mod reg_file;
mod register;

pub use reg_file::{GPR_CLASS, RegFile};
pub use register::{Register, RegisterClass};
