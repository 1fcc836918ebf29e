mod agents;
mod common;
mod companies;
