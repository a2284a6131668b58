//! Resource types of the Mattermost operator (`installation.mattermost.com`).

pub mod v1beta1;
