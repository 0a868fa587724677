use std::{future::Future, io, thread};

use libc::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tokio::sync::oneshot;
use tracing::info;

/// SIGINT / SIGTERM を受け取ったら完了する Future を返す
/// シグナルは専用スレッドで待ち、最初の1回だけを oneshot で渡す
pub fn interrupt() -> io::Result<impl Future<Output = ()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let (tx, rx) = oneshot::channel();

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            if tx.send(sig).is_err() {
                info!("received signal {} after the dinner ended", sig);
            }
        }
    });

    Ok(async move {
        match rx.await {
            Ok(sig) => info!("received signal {}", sig),
            // 送信側が消えた場合は割り込みなしとして扱う
            Err(_) => std::future::pending::<()>().await,
        }
    })
}
