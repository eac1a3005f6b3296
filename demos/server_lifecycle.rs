use std::env;
use tracing_subscriber::EnvFilter;
use upcloud_provisioner::{
    DesiredServer, Hostname, NetworkInterfaceConfig, ProvisionResult, TemplateConfig,
    TrackedServer, UpCloudClient,
};

const STATE_FILE: &str = "server_lifecycle.state.json";

/// Converges one server and keeps its tracked state next to the binary's
/// working directory. Pass `destroy` to delete it again.
#[tokio::main]
async fn main() -> ProvisionResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = UpCloudClient::builder().build()?;
    let account = client.verify_credentials().await?;
    println!("Authenticated as {} ({} credits)", account.username, account.credits);

    let servers = client.servers();
    let mut tracked = TrackedServer::load(STATE_FILE).await?;

    if env::args().nth(1).as_deref() == Some("destroy") {
        servers.delete(&mut tracked).await?;
        tracked.save(STATE_FILE).await?;
        println!("Server deleted");
        return Ok(());
    }

    let desired = DesiredServer::new(Hostname::new("demo.example.com")?, "fi-hel1")
        .with_plan("1xCPU-1GB")
        .with_interface(NetworkInterfaceConfig::public())
        .with_interface(NetworkInterfaceConfig::utility())
        .with_template(TemplateConfig::new("Debian GNU/Linux 12 (Bookworm)"));

    let observed = match servers.refresh(&mut tracked).await? {
        Some(_) => servers.update(&desired, &mut tracked).await,
        None => servers.create(&desired, &mut tracked).await,
    };
    tracked.save(STATE_FILE).await?;
    let observed = observed?;

    println!(
        "Server {} is running, connect with ssh {}@{}",
        observed.id, observed.connection.user, observed.connection.host
    );
    Ok(())
}
