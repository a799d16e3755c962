pub mod enrich;
pub mod inspect;
pub mod prepare;
pub mod status;
