//! Staging buffer for alerts produced during a speculative window

use crate::error::{Error, Result};
use crate::models::Alert;

#[derive(Debug, Default)]
pub(crate) struct ProvisionalBuffer {
    staged: Option<Vec<Alert>>,
}

impl ProvisionalBuffer {
    pub(crate) const fn is_active(&self) -> bool {
        self.staged.is_some()
    }

    /// Open the window. Windows do not nest.
    pub(crate) fn start(&mut self) -> Result<()> {
        if self.staged.is_some() {
            return Err(Error::ProvisionalAlreadyActive);
        }
        self.staged = Some(Vec::new());
        Ok(())
    }

    /// Hold an alert until the window closes; hands it back when none is open
    pub(crate) fn stage(&mut self, alert: Alert) -> Option<Alert> {
        match &mut self.staged {
            Some(staged) => {
                staged.push(alert);
                None
            }
            None => Some(alert),
        }
    }

    /// Close the window and return what was staged, in order
    pub(crate) fn finish(&mut self) -> Result<Vec<Alert>> {
        self.staged.take().ok_or(Error::ProvisionalNotActive)
    }

    pub(crate) fn clear(&mut self) {
        self.staged = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertPayload, Handle, Payment};

    fn alert() -> Alert {
        Alert::new(
            AlertPayload::Payment(Payment {
                success: false,
                plan_number: 0,
            }),
            Handle::UNDEF,
            "",
            1,
        )
    }

    #[test]
    fn test_nested_start_fails() {
        let mut buffer = ProvisionalBuffer::default();
        buffer.start().unwrap();
        assert!(matches!(buffer.start(), Err(Error::ProvisionalAlreadyActive)));
    }

    #[test]
    fn test_finish_without_start_fails() {
        let mut buffer = ProvisionalBuffer::default();
        assert!(matches!(buffer.finish(), Err(Error::ProvisionalNotActive)));
    }

    #[test]
    fn test_stage_only_while_active() {
        let mut buffer = ProvisionalBuffer::default();
        assert!(buffer.stage(alert()).is_some());

        buffer.start().unwrap();
        assert!(buffer.stage(alert()).is_none());
        assert!(buffer.stage(alert()).is_none());
        assert_eq!(buffer.finish().unwrap().len(), 2);
        assert!(!buffer.is_active());
    }
}
