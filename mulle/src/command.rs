pub(crate) mod hash;
pub(crate) mod layout;
pub(crate) mod main;
pub(crate) mod targets;
