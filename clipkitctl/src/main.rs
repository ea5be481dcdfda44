use clap::Parser;

fn main() {
    let cli = clipkitctl::Cli::parse();
    if let Err(err) = clipkitctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
