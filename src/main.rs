fn main() {
    if let Err(err) = codementor::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
