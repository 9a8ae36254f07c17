fn main() {
    if let Err(err) = moments_lib::run() {
        eprintln!("moments: {err:#}");
        std::process::exit(1);
    }
}
