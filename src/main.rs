fn main() {
    if handle_cli_flags() {
        return;
    }

    if let Err(err) = rss_waterfall::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("RSS Waterfall {}", rss_waterfall::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "RSS Waterfall — an image waterfall for your unread feed items.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n\nConfiguration comes from the environment: FEVER_ENDPOINT, FEVER_USERNAME,\nFEVER_PASSWORD (optional, cookie login otherwise), POCKET_CONSUMER_KEY,\nPOCKET_ACCESS_TOKEN (optional), MAX_IMAGES, SENTRY_DSN, PORT."
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
