//! Pipeline core: sanitize, then typeset-and-splice

pub mod sanitize;
pub mod splice;
