use geocasher_logic::{Choice, ChoiceHandler, Presenter, Prompt};
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};

/// Shows prompts as native message dialogs
pub struct TauriPresenter(AppHandle);

impl TauriPresenter {
    pub fn new(app: &AppHandle) -> Self {
        Self(app.clone())
    }
}

impl Presenter for TauriPresenter {
    fn present(&self, prompt: Prompt, respond: ChoiceHandler) {
        let confirm = prompt.choices.first().copied().unwrap_or(Choice::Acknowledge);
        let cancel = prompt.cancel_choice();

        let buttons = match prompt.choices {
            [only] => MessageDialogButtons::OkCustom(only.label().to_string()),
            [ok, dismiss, ..] => MessageDialogButtons::OkCancelCustom(
                ok.label().to_string(),
                dismiss.label().to_string(),
            ),
            [] => MessageDialogButtons::Ok,
        };

        self.0
            .dialog()
            .message(prompt.message)
            .title(prompt.title)
            .kind(MessageDialogKind::Info)
            .buttons(buttons)
            .show(move |confirmed| respond(if confirmed { confirm } else { cancel }));
    }
}
