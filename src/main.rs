fn main() {
    namespacer::cli::run();
}
