// Verdict command-line entry point.
// Usage: verdict run <solution> <test_case>

fn main() {
    verdict::cli::run();
}
