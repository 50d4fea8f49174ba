#[tokio::main]
async fn main() {
    tickets::start_server().await;
}
