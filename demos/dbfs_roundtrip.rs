use anyhow::{bail, Result};
use mozreport::{backend::rest::Server, config::RemoteConfig, Client};

struct Args {
    host: String,
    token: String,
    path: String,
    keep: bool,
}

impl Args {
    pub fn from_env() -> Result<Self> {
        let mut args = pico_args::Arguments::from_env();
        Ok(Args {
            host: args.value_from_str(["-H", "--host"])?,
            token: args.value_from_str(["-t", "--token"])?,
            path: args
                .opt_value_from_str(["-p", "--path"])?
                .unwrap_or_else(|| format!("/mozreport/roundtrip_{}", uuid::Uuid::new_v4())),
            keep: args.contains(["-k", "--keep"]),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::from_env()?;
    let mut client = Server::new(&RemoteConfig {
        token: args.token,
        host: args.host,
    });

    let contents = b"Hello, world";
    if client.exists(&args.path)? {
        println!("Removing leftover {}", args.path);
        client.delete(&args.path, false)?;
    }
    client.upload(contents, &args.path)?;
    println!("Uploaded {} bytes to dbfs:{}", contents.len(), args.path);

    if !client.exists(&args.path)? {
        bail!("{} is missing right after the upload", args.path);
    }
    let read = client.read(&args.path)?;
    if read != contents {
        bail!("read back {} bytes that differ from what was uploaded", read.len());
    }
    println!("Read back {} identical bytes", read.len());

    if !args.keep {
        client.delete(&args.path, false)?;
        println!("Deleted dbfs:{}", args.path);
    }
    Ok(())
}
