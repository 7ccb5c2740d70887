/// Module for creating and removing remote directories
pub(crate) mod directory;

/// Module for streaming remote files to the caller
pub(crate) mod download;

/// Module for deleting remote files
pub(crate) mod file;

/// Module for listing remote directory contents
pub(crate) mod list;

/// Module for uploading caller streams to remote files
pub(crate) mod upload;
