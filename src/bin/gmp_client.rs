use anyhow::{Error, Result};
use async_std::io::{stdin, BufReader};
use async_std::net::{TcpListener, TcpStream};
use async_std::task;
use async_std::task::block_on;
use futures::{AsyncBufReadExt, StreamExt};
use gomodem::{Color, Connection, GmpConfig, LocalColor};
use log::{error, info, LevelFilter};
use std::env;
use std::str::FromStr;

enum Mode {
    Connect,
    Listen,
}

struct Options {
    mode: Mode,
    address: String,
    config: GmpConfig,
    verbose: bool,
}

fn main() {
    let options = match parse_args(env::args().skip(1).collect()) {
        Ok(options) => options,
        Err(e) => {
            println!("{}", e);
            print_usage();
            return;
        }
    };
    let level = if options.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    env_logger::builder().filter_module("gomodem", level).init();
    if let Err(e) = block_on(run_client(options)) {
        error!("client stopped on error {}", e);
    }
}

async fn run_client(options: Options) -> Result<()> {
    let stream = match options.mode {
        Mode::Connect => TcpStream::connect(&options.address).await?,
        Mode::Listen => {
            let listener = TcpListener::bind(&options.address).await?;
            info!("listening on {}", listener.local_addr()?);
            let (stream, peer) = listener.accept().await?;
            info!("accepted {}", peer);
            stream
        }
    };
    let conn = Connection::new(stream.clone(), stream, options.config)?;
    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next().await {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            conn.interrupt_command().await;
            break;
        }
        // run each command on its own task so `quit` can interrupt a blocked one
        let conn = conn.clone();
        let line = line.to_string();
        task::spawn(async move {
            match run_command(&conn, &line).await {
                Ok(output) => println!("= {}", output),
                Err(e) => println!("? {}", e),
            }
        });
    }
    Ok(())
}

async fn run_command(conn: &Connection, line: &str) -> Result<String> {
    let cmd: Vec<&str> = line.split_whitespace().collect();
    let output = match cmd.as_slice() {
        ["newgame"] => {
            conn.new_game(conn.size()).await?;
            String::new()
        }
        ["waitnewgame"] => {
            conn.wait_new_game(conn.size()).await?;
            "NEWGAME".to_string()
        }
        ["play", color, x, y] => {
            conn.play(parse_color(color)?, i32::from_str(x)?, i32::from_str(y)?)
                .await?;
            String::new()
        }
        ["pass", color] => {
            conn.play(parse_color(color)?, -1, -1).await?;
            String::new()
        }
        ["undo"] => {
            conn.undo().await?;
            String::new()
        }
        ["wait", color] => conn.wait_move(parse_color(color)?).await?.to_string(),
        ["talk", ..] => {
            let text = line.splitn(2, ' ').nth(1).unwrap_or_default();
            conn.send_talk(&format!("{}\n", text)).await?;
            String::new()
        }
        ["gettalk"] => conn.get_talk().await?,
        ["queue"] => conn.queue().await?.join(", "),
        ["state"] => conn.state().await?.to_string(),
        _ => {
            print_help();
            Err(Error::msg(format!("unknown command: {}", line)))?
        }
    };
    Ok(output)
}

fn parse_color(color: &str) -> Result<Color> {
    match color.to_lowercase().as_str() {
        "b" | "black" => Ok(Color::Black),
        "w" | "white" => Ok(Color::White),
        _ => Err(Error::msg(format!("invalid color: {}", color))),
    }
}

fn parse_args(args: Vec<String>) -> Result<Options> {
    if args.len() < 3 {
        Err(Error::msg("missing arguments"))?
    }
    let mode = match args[0].as_str() {
        "connect" => Mode::Connect,
        "listen" => Mode::Listen,
        other => Err(Error::msg(format!("unknown mode: {}", other)))?,
    };
    let mut config = GmpConfig::new(u8::from_str(&args[2])?);
    let mut verbose = false;
    let mut rest = args[3..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--simple" => config.simple = true,
            "--verbose" => verbose = true,
            "--color" => {
                config.color = match rest.next().map(|c| c.as_str()) {
                    Some("unknown") => LocalColor::Unknown,
                    Some("white") => LocalColor::White,
                    Some("black") => LocalColor::Black,
                    _ => Err(Error::msg("--color takes unknown, white or black"))?,
                }
            }
            other => Err(Error::msg(format!("unknown option: {}", other)))?,
        }
    }
    config.validate()?;
    Ok(Options {
        mode,
        address: args[1].clone(),
        config,
        verbose,
    })
}

fn print_usage() {
    println!(
        "usage: ./gmp_client {{connect|listen}} {{address}} {{size}} [--simple] [--color unknown|white|black] [--verbose], example: ./gmp_client listen 127.0.0.1:7000 19"
    );
}

fn print_help() {
    println!(
        "commands: newgame | waitnewgame | play {{b|w}} {{x}} {{y}} | pass {{b|w}} | undo | wait {{b|w}} | talk {{text}} | gettalk | queue | state | quit"
    );
}
