use kit::Application;

mod ballots;
mod controllers;
mod providers;
mod routes;

#[tokio::main]
async fn main() {
    Application::new()
        .discover()
        .routes(routes::register)
        .run()
        .await;
}
