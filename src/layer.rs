pub mod memento;
pub mod node;
pub mod update;
