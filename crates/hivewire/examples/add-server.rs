//! Minimal RPC round trip over TCP: one `Add` call and one fire-and-forget
//! `Print`.
//!
//! Run with:
//!   RUST_LOG=debug cargo run -p hivewire --example add-server --features logging

use std::net::{TcpListener, TcpStream};
use std::thread;

use hivewire::codec::{Destination, Scalar};
use hivewire::logging::init_logging;
use hivewire::{record, ClientCodec, CodecError, ServerCodec};

record! {
    #[derive(Debug, Default)]
    pub struct AddArgs {
        pub a: i64,
        pub b: i64,
    }
}

fn serve(stream: TcpStream) -> Result<(), CodecError> {
    let mut server = ServerCodec::from_stream(stream)?;
    loop {
        let header = match server.read_call_header() {
            Ok(header) => header,
            Err(CodecError::Frame(hivewire::frame::FrameError::ConnectionClosed)) => break,
            Err(err) => return Err(err),
        };

        match header.method.as_str() {
            "Add" => {
                let mut args = AddArgs::default();
                server.read_call_body((&mut args).into())?;
                if let Some(session) = header.session {
                    server.write_result(session, None, Some(&(args.a + args.b)))?;
                }
            }
            "Print" => {
                let mut text = Scalar(String::new());
                server.read_call_body((&mut text).into())?;
                eprintln!("server: {}", text.0);
            }
            other => {
                server.read_call_body(Destination::None)?;
                if let Some(session) = header.session {
                    let message = format!("unknown method {other}");
                    server.write_result(session, Some(&message), None)?;
                }
            }
        }
    }
    server.close()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    eprintln!("Listening on {addr}");

    let handle = thread::spawn(move || -> Result<(), CodecError> {
        let (stream, _) = listener.accept().map_err(hivewire::frame::FrameError::Io)?;
        serve(stream)
    });

    let mut client = ClientCodec::from_stream(TcpStream::connect(addr)?)?;

    client.write_call("cluster_service", "Add", Some(7), Some(&AddArgs { a: 1, b: 2 }))?;
    let header = client.read_result_header()?;
    let mut sum = 0i64;
    client.read_result_body((&mut sum).into())?;
    eprintln!("client: session {} -> {sum}", header.session);

    client.write_call("cluster_service", "Print", None, Some(&"hello"))?;

    client.write_call("cluster_service", "Nope", Some(8), None)?;
    let header = client.read_result_header()?;
    eprintln!("client: session {} -> {:?}", header.session, header.error);

    client.close()?;
    handle.join().map_err(|_| "server thread panicked")??;
    Ok(())
}
