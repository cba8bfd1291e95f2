#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate hiro_system_kit;

#[macro_use]
extern crate ordledger;

pub mod cli;
pub mod config;

fn main() {
    cli::main();
}
