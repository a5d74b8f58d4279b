pub mod time;
pub mod pagination;
pub mod locks;
pub mod validation;
