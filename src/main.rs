#[tokio::main]
async fn main() {
    canteen::start_server().await;
}
