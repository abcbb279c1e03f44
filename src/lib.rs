pub mod changes;
pub mod cli;
pub mod detect;
pub mod error;
pub mod evaluate;
pub mod gate;
pub mod github;
pub mod identity;
pub mod index;
pub mod model;
pub mod parsers;
pub mod provider;
pub mod report;
pub mod sink;
