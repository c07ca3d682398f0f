// AutoTrans - Main entry point
use autotrans::cli::Cli;
use clap::Parser;
use std::process;

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.user_message(cli.use_colors()));
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
