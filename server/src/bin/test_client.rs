//! Headless probe client for manual smoke testing against a running server.

use bincode::{deserialize, serialize};
use shared::{Direction, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let token = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "probe:Probe:Blue".to_string());

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let server_addr = "127.0.0.1:8080".parse::<SocketAddr>()?;
    let mut buf = [0u8; 65536];

    println!("Connecting to {} with token {:?}", server_addr, token);
    let connect = serialize(&Packet::Connect { token })?;
    socket.send_to(&connect, server_addr).await?;

    // The server answers a successful handshake with Init followed by the
    // chat histories; drain whatever arrives in the first second.
    loop {
        match timeout(Duration::from_secs(1), socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => match deserialize::<Packet>(&buf[0..len]) {
                Ok(Packet::Init { init }) => {
                    println!(
                        "Joined: map {}x{}, {} players, self at ({}, {}) with {} moves",
                        init.map_size,
                        init.map_size,
                        init.players.len(),
                        init.self_state.x,
                        init.self_state.y,
                        init.self_state.moves
                    );
                }
                Ok(Packet::Reject { reason }) => {
                    println!("Rejected: {}", reason);
                    return Ok(());
                }
                Ok(other) => println!("Received: {:?}", other),
                Err(e) => println!("Failed to deserialize response: {}", e),
            },
            _ => break,
        }
    }

    // Walk a small square, printing what the server reports back.
    let walk = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];
    for direction in walk {
        let packet = Packet::Move { direction };
        println!("Sending move: {:?}", direction);
        socket.send_to(&serialize(&packet)?, server_addr).await?;

        while let Ok(Ok((len, _))) =
            timeout(Duration::from_millis(500), socket.recv_from(&mut buf)).await
        {
            match deserialize::<Packet>(&buf[0..len]) {
                Ok(Packet::Patch { patch }) => {
                    println!(
                        "Painted ({}, {}) for team {}{}",
                        patch.painted.x,
                        patch.painted.y,
                        patch.painted.team_index,
                        if patch.map.is_some() { " (capture!)" } else { "" }
                    );
                }
                Ok(Packet::SelfUpdate { self_state }) => {
                    println!(
                        "Self: at ({}, {}), {} moves, {}ms to next",
                        self_state.x, self_state.y, self_state.moves, self_state.ms_to_next_move
                    );
                }
                Ok(Packet::Reject { reason }) => println!("Move rejected: {}", reason),
                Ok(other) => println!("Received: {:?}", other),
                Err(e) => println!("Failed to deserialize packet: {}", e),
            }
        }

        sleep(Duration::from_millis(500)).await;
    }

    println!("Sending disconnect");
    socket.send_to(&serialize(&Packet::Disconnect)?, server_addr).await?;
    println!("Test client finished");

    Ok(())
}
