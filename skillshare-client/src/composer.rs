use crate::{
    api::{self, Comment, CommentId},
    Error, PostView,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComposerState {
    Idle,
    Submitting,
    /// Last submission failed, with the message to display inline
    Failed(String),
}

/// Draft of a new comment, or of an edit to an existing one.
///
/// The draft is only cleared once the server confirmed the submission, so a
/// failure never loses what the user typed.
#[derive(Clone, Debug)]
pub struct Composer {
    draft: String,
    editing: Option<CommentId>,
    state: ComposerState,
}

impl Default for Composer {
    fn default() -> Composer {
        Composer::new()
    }
}

impl Composer {
    pub fn new() -> Composer {
        Composer {
            draft: String::new(),
            editing: None,
            state: ComposerState::Idle,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft = String::from(text);
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    /// Comment being edited, if not composing a new one
    pub fn editing(&self) -> Option<&CommentId> {
        self.editing.as_ref()
    }

    pub fn start_edit(&mut self, comment: &Comment) {
        self.editing = Some(comment.id.clone());
        self.draft = comment.text.clone();
        self.state = ComposerState::Idle;
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
        self.draft.clear();
        self.state = ComposerState::Idle;
    }

    pub async fn submit(&mut self, view: &PostView) -> Result<Comment, Error> {
        if let Err(err) = api::validate_comment_text(&self.draft) {
            let err = Error::from(err);
            self.state = ComposerState::Failed(err.user_message());
            return Err(err);
        }
        self.state = ComposerState::Submitting;
        let res = match &self.editing {
            Some(id) => view.edit_comment(id, &self.draft).await,
            None => view.add_comment(&self.draft).await,
        };
        match res {
            Ok(comment) => {
                self.draft.clear();
                self.editing = None;
                self.state = ComposerState::Idle;
                Ok(comment)
            }
            Err(err) => {
                tracing::info!(?err, "comment submission failed");
                self.state = ComposerState::Failed(err.user_message());
                Err(err)
            }
        }
    }
}
