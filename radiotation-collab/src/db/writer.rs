use futures_util::future::BoxFuture;
use log::{debug, error};
use sqlx::{Connection, SqliteConnection};
use tokio::sync::{mpsc, oneshot};

use super::{DatabaseError, Result};

type Job = Box<dyn for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, ()> + Send>;

enum Message {
    Job(Job),
    Shutdown(oneshot::Sender<()>),
}

/// Owns the only connection that may write, and runs jobs against it one at a time.
///
/// Jobs run in the order they were submitted, and each one runs to completion
/// before the next starts, so a job never observes another job half done.
pub struct Writer {
    sender: mpsc::Sender<Message>,
}

impl Writer {
    /// Moves the connection into a new writer task.
    pub fn spawn(mut connection: SqliteConnection, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));

        tokio::spawn(async move {
            debug!("Database writer started");

            while let Some(message) = receiver.recv().await {
                match message {
                    Message::Job(job) => job(&mut connection).await,
                    Message::Shutdown(done) => {
                        receiver.close();

                        if let Err(e) = connection.close().await {
                            error!("Could not close the write connection: {}", e);
                        }

                        let _ = done.send(());
                        debug!("Database writer stopped");
                        return;
                    }
                }
            }
        });

        Self { sender }
    }

    /// Runs `operation` on the writer task and waits for its result.
    pub async fn execute<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();

        let job = job(move |connection| {
            Box::pin(async move {
                let result = operation(connection).await;
                // Nobody to tell if the caller stopped waiting
                let _ = reply.send(result);
            })
        });

        self.sender
            .send(Message::Job(job))
            .await
            .map_err(|_| DatabaseError::WriterClosed)?;

        response.await.map_err(|_| DatabaseError::WriterClosed)?
    }

    /// Lets queued jobs finish, then closes the connection.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();

        if self.sender.send(Message::Shutdown(done)).await.is_ok() {
            let _ = finished.await;
        }
    }
}

fn job<F>(f: F) -> Job
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, ()> + Send + 'static,
{
    Box::new(f)
}
