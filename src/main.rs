use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    llmdesk::cli::main()
}
