//! Report serializers

pub mod csv;
pub mod json;
