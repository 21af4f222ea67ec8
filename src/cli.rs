mod args;

pub use args::{CheckArgs, Cli, Command, ReplayArgs};
