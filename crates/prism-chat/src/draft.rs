//! Message composition: input text and attachment uploads

use prism_ai::{Attachment, AttachmentId, UploadState};

use crate::error::{Error, Result};

/// The message being composed.
///
/// Attachments belong to the draft until it is taken for submission; only
/// committed uploads can leave it.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    text: String,
    attachments: Vec<Attachment>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Add a file to upload. Returns its id.
    pub fn attach(&mut self, attachment: Attachment) -> AttachmentId {
        let id = attachment.id.clone();
        self.attachments.push(attachment);
        id
    }

    pub fn remove(&mut self, id: &AttachmentId) -> Option<Attachment> {
        let pos = self.attachments.iter().position(|a| &a.id == id)?;
        Some(self.attachments.remove(pos))
    }

    /// Pending or failed → uploading
    pub fn start_upload(&mut self, id: &AttachmentId) -> Result<()> {
        let attachment = self.find(id)?;
        match attachment.upload_state {
            UploadState::Pending | UploadState::Failed => {
                attachment.upload_state = UploadState::Uploading { progress: 0.0 };
                Ok(())
            }
            state => Err(Error::validation(format!(
                "Cannot start upload of {} while {:?}",
                attachment.name, state
            ))),
        }
    }

    pub fn set_progress(&mut self, id: &AttachmentId, progress: f32) -> Result<()> {
        let attachment = self.find(id)?;
        match attachment.upload_state {
            UploadState::Uploading { .. } => {
                attachment.upload_state = UploadState::Uploading {
                    progress: progress.clamp(0.0, 1.0),
                };
                Ok(())
            }
            state => Err(Error::validation(format!(
                "{} is not uploading ({:?})",
                attachment.name, state
            ))),
        }
    }

    /// Uploading → committed at `url`
    pub fn commit_upload(&mut self, id: &AttachmentId, url: impl Into<String>) -> Result<()> {
        let attachment = self.find(id)?;
        if !matches!(attachment.upload_state, UploadState::Uploading { .. }) {
            return Err(Error::validation(format!(
                "{} is not uploading",
                attachment.name
            )));
        }
        attachment.url = url.into();
        attachment.upload_state = UploadState::Committed;
        Ok(())
    }

    pub fn fail_upload(&mut self, id: &AttachmentId) -> Result<()> {
        let attachment = self.find(id)?;
        attachment.upload_state = UploadState::Failed;
        Ok(())
    }

    pub fn is_uploading(&self) -> bool {
        self.attachments
            .iter()
            .any(|a| matches!(a.upload_state, UploadState::Uploading { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }

    /// Whether the draft could be submitted as is
    pub fn can_submit(&self) -> bool {
        !self.is_empty() && self.attachments.iter().all(Attachment::is_committed)
    }

    /// Hand the contents over for submission and clear the draft
    pub fn take(&mut self) -> Result<(String, Vec<Attachment>)> {
        if let Some(a) = self.attachments.iter().find(|a| !a.is_committed()) {
            return Err(Error::validation(format!("{} has not finished uploading", a.name)));
        }
        Ok((
            std::mem::take(&mut self.text),
            std::mem::take(&mut self.attachments),
        ))
    }

    /// Put input back after a failed submission
    pub fn restore(&mut self, text: String, attachments: Vec<Attachment>) {
        self.text = text;
        self.attachments = attachments;
    }

    fn find(&mut self, id: &AttachmentId) -> Result<&mut Attachment> {
        self.attachments
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| Error::validation(format!("Unknown attachment {}", id)))
    }
}
