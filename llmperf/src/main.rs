fn main() {
    if let Err(err) = llmperf::run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
