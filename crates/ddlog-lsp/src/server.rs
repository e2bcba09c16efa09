use crate::config::DdlogConfig;
use crate::dispatch::Dispatcher;
use crate::error::{BoundaryError, LspError};
use crate::handlers::{from_lsp_position, from_lsp_range, to_lsp_range};
use crate::session::Session;
use ddlog_core::TextEdit;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp_server::ls_types::{
    DidChangeConfigurationParams, DidChangeTextDocumentParams, DidChangeWorkspaceFoldersParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DocumentSymbolParams,
    DocumentSymbolResponse, GotoDefinitionParams, GotoDefinitionResponse, InitializeParams,
    InitializeResult, InitializedParams, Location, MessageType, OneOf, ServerCapabilities,
    ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, Uri,
    WorkspaceFoldersServerCapabilities, WorkspaceServerCapabilities, WorkspaceSymbolParams,
    WorkspaceSymbolResponse,
};
use tower_lsp_server::{Client, LanguageServer, jsonrpc::Result};

pub struct Backend {
    pub(crate) client: Client,
    dispatcher: Arc<Dispatcher>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            dispatcher: Arc::new(Dispatcher::new(Arc::new(Session::new()))),
        }
    }

    /// Get a reference to the dispatcher (primarily for testing/benchmarking).
    #[doc(hidden)]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn path_of(uri: &Uri) -> Option<PathBuf> {
        let path = uri.to_file_path().map(|p| p.to_path_buf());
        if path.is_none() {
            tracing::warn!("ignoring non-file URI: {:?}", uri);
        }
        path
    }

    fn require_path(uri: &Uri) -> Result<PathBuf> {
        Self::path_of(uri).ok_or_else(|| {
            BoundaryError::from(LspError::InvalidUri(format!("{uri:?}"))).into()
        })
    }

    /// Recomputes diagnostics for `path` and sends them to the client.
    async fn publish_diagnostics(&self, uri: Uri, path: &Path, version: Option<i32>) {
        let diagnostics = self.dispatcher.query_diagnostics(path).await;
        tracing::debug!(
            "publishing {} diagnostics for {}",
            diagnostics.len(),
            path.display()
        );
        self.client
            .publish_diagnostics(uri, diagnostics, version)
            .await;
    }

    async fn report_mutation_error(&self, path: &Path, error: BoundaryError) {
        tracing::error!("document update failed for {}: {}", path.display(), error);
        self.client
            .log_message(
                MessageType::ERROR,
                format!("{}: {}", path.display(), error),
            )
            .await;
    }

    fn apply_configuration(&self, settings: serde_json::Value) {
        let settings = match settings.get("ddlog") {
            Some(section) => section.clone(),
            None => settings,
        };
        let config = DdlogConfig::from_value(settings);
        tracing::debug!("loaded configuration: {:?}", config);
        self.dispatcher.session().set_config(config);
    }

    fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(
                TextDocumentSyncKind::INCREMENTAL,
            )),
            document_symbol_provider: Some(OneOf::Left(true)),
            definition_provider: Some(OneOf::Left(true)),
            workspace_symbol_provider: Some(OneOf::Left(true)),
            workspace: Some(WorkspaceServerCapabilities {
                workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                    supported: Some(true),
                    change_notifications: Some(OneOf::Left(true)),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("initializing ddlog-lsp server");

        if let Some(init_options) = params.initialization_options {
            self.apply_configuration(init_options);
        }

        for folder in params.workspace_folders.unwrap_or_default() {
            if let Some(root) = Self::path_of(&folder.uri) {
                self.dispatcher.add_workspace_folder(root, folder.name);
            }
        }

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "ddlog-lsp".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("ddlog-lsp server initialized");
        self.client
            .log_message(MessageType::INFO, "ddlog-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down ddlog-lsp server");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        tracing::info!("document opened: {:?}", uri);

        let Some(path) = Self::path_of(&uri) else {
            return;
        };
        match self
            .dispatcher
            .open_document(&path, &params.text_document.text, Some(version))
        {
            Ok(_) => self.publish_diagnostics(uri, &path, Some(version)).await,
            Err(e) if e.code == crate::error::codes::INVALID_DOCUMENT => {
                tracing::debug!("unsupported file type: {:?}", uri);
            }
            Err(e) => self.report_mutation_error(&path, e).await,
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let Some(path) = Self::path_of(&uri) else {
            return;
        };

        let edits: Vec<TextEdit> = params
            .content_changes
            .into_iter()
            .map(|change| TextEdit {
                range: change.range.map(from_lsp_range),
                new_text: change.text,
            })
            .collect();

        match self
            .dispatcher
            .change_document(&path, Some(version), &edits)
        {
            Ok(_) => self.publish_diagnostics(uri, &path, Some(version)).await,
            Err(e) => self.report_mutation_error(&path, e).await,
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document closed: {:?}", uri);

        let Some(path) = Self::path_of(&uri) else {
            return;
        };
        if let Err(e) = self.dispatcher.close_document(&path) {
            tracing::debug!("close ignored: {}", e);
        }
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        for folder in params.event.removed {
            if let Some(root) = Self::path_of(&folder.uri) {
                self.dispatcher.remove_workspace_folder(&root);
            }
        }
        for folder in params.event.added {
            if let Some(root) = Self::path_of(&folder.uri) {
                self.dispatcher.add_workspace_folder(root, folder.name);
            }
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.apply_configuration(params.settings);
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let path = Self::require_path(&params.text_document.uri)?;
        let symbols = self.dispatcher.query_symbols(&path).await;
        Ok(Some(DocumentSymbolResponse::Nested(
            symbols.iter().map(|symbol| symbol.to_lsp()).collect(),
        )))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params.position;
        let path = Self::require_path(&params.text_document_position_params.text_document.uri)?;

        let Some(target) = self
            .dispatcher
            .query_definition(&path, from_lsp_position(position))
            .await
        else {
            return Ok(None);
        };
        let Some(uri) = Uri::from_file_path(&target.path) else {
            tracing::warn!("cannot build URI for {}", target.path.display());
            return Ok(None);
        };
        Ok(Some(GotoDefinitionResponse::Scalar(Location {
            uri,
            range: to_lsp_range(target.range),
        })))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<WorkspaceSymbolResponse>> {
        let matches = self.dispatcher.query_workspace_symbols(&params.query).await;
        let symbols = matches
            .iter()
            .filter_map(|symbol| {
                let uri = Uri::from_file_path(&symbol.path)?;
                Some(symbol.to_lsp(uri))
            })
            .collect();
        Ok(Some(WorkspaceSymbolResponse::Flat(symbols)))
    }
}
