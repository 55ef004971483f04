#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_scene_server::init().await
}
