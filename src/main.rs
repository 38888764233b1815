fn main() {
    if let Err(e) = clinic_flow::run() {
        tracing::error!(error = %e, "clinic-flow failed");
        eprintln!("clinic-flow: {e}");
        std::process::exit(1);
    }
}
