//! Scoped repository checkout into an ephemeral directory.
//!
//! Clones the base branch of the triggering repository and force-checks
//! out the exact base commit, authenticating with the platform token in
//! place of a personal credential.

use std::fmt;

use camino::Utf8Path;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, FetchOptions, Oid, RemoteCallbacks};
use thiserror::Error;

/// Username sentinel paired with the platform token for basic auth.
const CLONE_USERNAME: &str = "token";

/// Errors raised while cloning or checking out the base revision.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckoutError {
    /// A git operation failed (network, auth, or filesystem).
    #[error("git error: {message}")]
    Git {
        /// Error detail from the git2 library.
        message: String,
    },

    /// The base commit is not present in the cloned branch.
    #[error("base commit not found in clone: {sha}")]
    CommitNotFound {
        /// The commit SHA that could not be resolved.
        sha: String,
    },
}

impl From<git2::Error> for CheckoutError {
    fn from(error: git2::Error) -> Self {
        Self::Git {
            message: error.message().to_owned(),
        }
    }
}

/// Identifies the revision to clone and the credential to clone with.
#[derive(Clone, PartialEq, Eq)]
pub struct CheckoutSource {
    repo_url: String,
    base_branch: String,
    base_commit: String,
    token: String,
}

impl CheckoutSource {
    /// Creates a checkout source.
    #[must_use]
    pub fn new(
        repo_url: impl Into<String>,
        base_branch: impl Into<String>,
        base_commit: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            base_branch: base_branch.into(),
            base_commit: base_commit.into(),
            token: token.into(),
        }
    }

    /// Clone URL of the repository.
    #[must_use]
    pub const fn repo_url(&self) -> &str {
        self.repo_url.as_str()
    }

    /// Branch restricted to during the clone.
    #[must_use]
    pub const fn base_branch(&self) -> &str {
        self.base_branch.as_str()
    }

    /// Exact commit checked out after the clone.
    #[must_use]
    pub const fn base_commit(&self) -> &str {
        self.base_commit.as_str()
    }

    pub(crate) const fn token(&self) -> &str {
        self.token.as_str()
    }
}

impl fmt::Debug for CheckoutSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CheckoutSource")
            .field("repo_url", &self.repo_url)
            .field("base_branch", &self.base_branch)
            .field("base_commit", &self.base_commit)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Checkout of a repository revision into a target directory.
#[cfg_attr(test, mockall::automock)]
pub trait RepositoryCheckout: Send + Sync {
    /// Clones the base branch into `target` and force-checks out the base
    /// commit.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Git`] on clone or checkout failure and
    /// [`CheckoutError::CommitNotFound`] when the base commit is not
    /// reachable from the cloned branch.
    fn checkout(&self, target: &Utf8Path, source: &CheckoutSource) -> Result<(), CheckoutError>;
}

/// Git2-based implementation of [`RepositoryCheckout`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Checkout;

impl Git2Checkout {
    /// Creates the checkout implementation.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RepositoryCheckout for Git2Checkout {
    fn checkout(&self, target: &Utf8Path, source: &CheckoutSource) -> Result<(), CheckoutError> {
        let token = source.token().to_owned();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext(CLONE_USERNAME, &token)
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        let repo = RepoBuilder::new()
            .branch(source.base_branch())
            .fetch_options(fetch_options)
            .clone(source.repo_url(), target.as_std_path())?;

        let oid =
            Oid::from_str(source.base_commit()).map_err(|_| CheckoutError::CommitNotFound {
                sha: source.base_commit().to_owned(),
            })?;
        let commit = repo
            .find_commit(oid)
            .map_err(|_| CheckoutError::CommitNotFound {
                sha: source.base_commit().to_owned(),
            })?;

        // Force semantics: the clone is pristine, but determinism requires
        // discarding any working-tree difference explicitly.
        let mut checkout_options = CheckoutBuilder::new();
        checkout_options.force();
        repo.checkout_tree(commit.as_object(), Some(&mut checkout_options))?;
        repo.set_head_detached(oid)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkout_tests.rs"]
mod tests;
