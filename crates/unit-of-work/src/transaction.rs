use crate::{ActingContext, Error, Result};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One unit of persistent work.
pub trait Session {
    fn commit(&mut self) -> Result<(), BoxError>;

    fn rollback(&mut self);
}

pub trait SessionFactory {
    type Session: Session;

    fn open(&self) -> Result<Self::Session, BoxError>;
}

type Task<S> = Box<dyn FnOnce(&mut S) -> Result<(), BoxError>>;

/// A session plus work that may only run once that session has committed.
///
/// Tasks are `'static`: they capture entity ids and re-load what they need from the fresh
/// session they are handed, never references into this transaction.
pub struct Transaction<'f, F: SessionFactory> {
    factory: &'f F,
    session: F::Session,
    after_commit: Vec<Task<F::Session>>,
    finished: bool,
}

impl<'f, F: SessionFactory> Transaction<'f, F> {
    pub fn begin(factory: &'f F) -> Result<Self> {
        let session = factory.open().map_err(Error::Open)?;
        Ok(Self {
            factory,
            session,
            after_commit: Vec::new(),
            finished: false,
        })
    }

    pub fn session(&mut self) -> &mut F::Session {
        &mut self.session
    }

    /// Queue `task` to run after a successful [`Transaction::commit`].
    pub fn run_after_commit(
        &mut self,
        task: impl FnOnce(&mut F::Session) -> Result<(), BoxError> + 'static,
    ) {
        self.after_commit.push(Box::new(task));
    }

    /// Like [`Transaction::run_after_commit`], with `actor` pushed on the [`ActingContext`]
    /// while the task runs.
    pub fn run_after_commit_as<A: 'static>(
        &mut self,
        actor: A,
        task: impl FnOnce(&mut F::Session) -> Result<(), BoxError> + 'static,
    ) {
        self.run_after_commit(move |session| {
            let _acting = ActingContext::push(actor);
            task(session)
        });
    }

    pub fn pending_tasks(&self) -> usize {
        self.after_commit.len()
    }

    /// Commit the session, then run queued tasks in order, each on its own fresh session.
    ///
    /// A failing task is logged and skipped; the transaction stays committed.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let tasks = std::mem::take(&mut self.after_commit);
        if let Err(err) = self.session.commit() {
            self.session.rollback();
            if !tasks.is_empty() {
                log::debug!("discarding {} after-commit tasks of failed commit", tasks.len());
            }
            return Err(Error::Commit(err));
        }

        let total = tasks.len();
        for (index, task) in tasks.into_iter().enumerate() {
            if let Err(err) = self.run_task(task) {
                log::warn!("after-commit task {}/{} failed: {}", index + 1, total, err);
            }
        }
        Ok(())
    }

    /// Roll back and discard queued tasks. Dropping an unfinished transaction does the same.
    pub fn rollback(mut self) {
        self.abort();
    }

    fn run_task(&self, task: Task<F::Session>) -> Result<(), BoxError> {
        let mut session = self.factory.open()?;
        match task(&mut session).and_then(|()| session.commit()) {
            Ok(()) => Ok(()),
            Err(err) => {
                session.rollback();
                Err(err)
            }
        }
    }

    fn abort(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if !self.after_commit.is_empty() {
            log::debug!(
                "discarding {} after-commit tasks of rolled back transaction",
                self.after_commit.len()
            );
            self.after_commit.clear();
        }
        self.session.rollback();
    }
}

impl<F: SessionFactory> Drop for Transaction<'_, F> {
    fn drop(&mut self) {
        self.abort();
    }
}
