pub mod interp;
pub mod trails;
pub mod view;
