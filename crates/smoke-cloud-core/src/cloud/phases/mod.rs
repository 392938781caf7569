pub mod decay;
pub mod growth;
