//! Wire types shared between the document-analysis backend contract and its clients.

pub mod domain;
pub mod error;
pub mod protocol;
