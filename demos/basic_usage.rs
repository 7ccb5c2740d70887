// demos/basic_usage.rs
// Run with: cargo run --example basic_usage -- example.com

use sftp_transport::{SftpTransport, TransportOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: basic_usage <host>"))?;

    // 1. Build the transport; username and agent default to $USER and $SSH_AUTH_SOCK
    let mut transport = SftpTransport::new(TransportOptions::new(host))?;

    // 2. Connect ssh and open sftp
    transport.setup().await?;
    println!("✅ Connected");

    // 3. Work with the remote filesystem
    transport.make_directory("sftp-transport-demo").await?;
    let mut page: &[u8] = b"<h1>hello</h1>\n";
    transport
        .put_file("sftp-transport-demo/index.html", page.len() as u64, &mut page)
        .await?;

    for name in transport.list_directory("sftp-transport-demo").await? {
        println!("  - {name}");
    }

    let mut reader = transport.create_read_stream("sftp-transport-demo/index.html");
    let mut content = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut content).await?;
    print!("{content}");

    transport.delete_file("sftp-transport-demo/index.html").await?;
    transport.delete_directory("sftp-transport-demo").await?;

    // 4. Close sftp, then ssh
    transport.cleanup().await?;
    println!("✅ All done!");

    Ok(())
}
