//! Analyzer entry point
//!
//! [`Analyzer`] holds the session and the catalog collaborators and turns a
//! parsed statement into an [`Analysis`]: rewrite first, then resolve and
//! validate the rewritten tree.

use sqlscope_ast::{Expr, Spanned, Statement};
use sqlscope_catalog::{AccessControl, FunctionRegistry, Metadata, Session};
use sqlscope_types::TypeCoercer;
use std::sync::Arc;

use crate::analysis::Analysis;
use crate::error::Result;
use crate::rewrite::{rewrite, RewriteContext};
use crate::statement_analyzer::{AnalyzerContext, StatementAnalyzer};

/// Semantic analyzer bound to one session
///
/// The catalog collaborators are shared; an analyzer is cheap to clone
/// and `analyze` never mutates it, so one instance can serve concurrent
/// callers.
#[derive(Clone)]
pub struct Analyzer {
    session: Session,
    metadata: Arc<dyn Metadata>,
    functions: Arc<dyn FunctionRegistry>,
    access_control: Arc<dyn AccessControl>,
}

impl Analyzer {
    pub fn new(
        session: Session,
        metadata: Arc<dyn Metadata>,
        functions: Arc<dyn FunctionRegistry>,
        access_control: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            session,
            metadata,
            functions,
            access_control,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Same collaborators, different session
    pub fn with_session(&self, session: Session) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    /// Analyze one statement
    ///
    /// `parameters` are the values bound to `?` placeholders, by position.
    /// With `is_describe` the statement is being described rather than
    /// executed: placeholders need no bound value and their types are
    /// inferred from context.
    pub fn analyze(
        &self,
        statement: Spanned<Statement>,
        parameters: Vec<Expr>,
        is_describe: bool,
    ) -> Result<Analysis> {
        let span = statement.span;
        log::debug!(
            "Start analysis of {} for user {}",
            statement.kind_name(),
            self.session.identity.user
        );

        let result = self.run(statement, parameters, is_describe);
        match &result {
            Ok(analysis) => log::debug!(
                "Analyzed {}: {} output column(s), {} scope frame(s)",
                analysis
                    .statement_kind()
                    .map_or_else(|| "statement".to_string(), |k| k.to_string()),
                analysis.output_columns().len(),
                analysis.scopes().len()
            ),
            Err(err) => log::debug!("Analysis failed: [{}] {}", err.code, err.message),
        }
        result.map_err(|e| e.or_span(span))
    }

    fn run(&self, statement: Spanned<Statement>, parameters: Vec<Expr>, is_describe: bool) -> Result<Analysis> {
        let rewrite_ctx = RewriteContext {
            session: &self.session,
            metadata: self.metadata.as_ref(),
            functions: self.functions.as_ref(),
            access_control: self.access_control.as_ref(),
            parameters: &parameters,
        };
        let rewritten = rewrite(&rewrite_ctx, statement)?;
        log::debug!("Rewritten: {}", rewritten.inner);

        let mut analysis = Analysis::new(rewritten.clone(), parameters, is_describe);
        let ctx = AnalyzerContext {
            session: &self.session,
            metadata: self.metadata.as_ref(),
            functions: self.functions.as_ref(),
            access_control: self.access_control.as_ref(),
            coercer: TypeCoercer::new(),
        };
        StatementAnalyzer::new(ctx, &mut analysis).analyze(&rewritten)?;
        Ok(analysis)
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{analyze, analyze_with, analyzer_with_session, select_from};
    use crate::analysis::{DescribeRow, StatementKind};
    use pretty_assertions::assert_eq;
    use sqlscope_ast::{
        DescribeInput, DescribeOutput, Explain, ExplainFormat, ExplainOption, ExplainType, Expr,
        Identifier, QualifiedName, ShowColumns, ShowTables, Span, Statement,
    };
    use sqlscope_catalog::Session;
    use sqlscope_diagnostics::{SQL0100, SQL0104, SQL0201};
    use sqlscope_types::SqlType;

    fn explain(statement: Statement, options: Vec<ExplainOption>, analyze: bool) -> Statement {
        Statement::Explain(Explain {
            statement: Box::new(statement.spanned(Span::new(8, 30))),
            analyze,
            verbose: false,
            options,
        })
    }

    #[test]
    fn test_show_tables_is_analyzed_as_query() {
        let analysis = analyze(Statement::ShowTables(ShowTables::default())).unwrap();
        assert_eq!(analysis.statement_kind(), Some(StatementKind::Query));
        let columns: Vec<_> = analysis.output_columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["Table"]);
        assert!(matches!(analysis.statement().inner, Statement::Query(_)));
    }

    #[test]
    fn test_show_columns_output() {
        let analysis = analyze(Statement::ShowColumns(ShowColumns {
            table: QualifiedName::from("orders"),
        }))
        .unwrap();
        let columns: Vec<_> = analysis
            .output_columns()
            .iter()
            .map(|c| (c.name.as_str(), c.data_type))
            .collect();
        assert_eq!(
            columns,
            vec![
                ("Column", SqlType::Varchar),
                ("Type", SqlType::Varchar),
                ("Comment", SqlType::Varchar),
            ]
        );
    }

    #[test]
    fn test_explain_output_and_options() {
        let analysis = analyze(explain(
            select_from("orders", vec![Expr::identifier("id")]),
            vec![ExplainOption::Format(ExplainFormat::Json)],
            false,
        ))
        .unwrap();
        assert_eq!(analysis.statement_kind(), Some(StatementKind::Explain));
        assert_eq!(analysis.update_type(), None);
        let options = analysis.explain_options().unwrap();
        assert_eq!(options.explain_type, ExplainType::Logical);
        assert_eq!(options.format, ExplainFormat::Json);
        assert_eq!(analysis.output_columns()[0].name, "Query Plan");
    }

    #[test]
    fn test_explain_validate_output() {
        let analysis = analyze(explain(
            select_from("orders", vec![Expr::identifier("id")]),
            vec![ExplainOption::Type(ExplainType::Validate)],
            false,
        ))
        .unwrap();
        assert_eq!(analysis.output_columns()[0].name, "Valid");
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Boolean);
    }

    #[test]
    fn test_explain_analyze_with_logical_type() {
        let err = analyze(explain(
            select_from("orders", vec![Expr::identifier("id")]),
            vec![ExplainOption::Type(ExplainType::Logical)],
            true,
        ))
        .unwrap_err();
        assert_eq!(err.code, SQL0104);
    }

    #[test]
    fn test_explain_reports_inner_errors() {
        let err = analyze(explain(
            select_from("orders", vec![Expr::identifier("nope")]),
            vec![],
            false,
        ))
        .unwrap_err();
        assert_eq!(err.code, SQL0201);
    }

    #[test]
    fn test_describe_output_rows() {
        let prepared = select_from(
            "orders",
            vec![Expr::identifier("id"), Expr::function("count", vec![])],
        );
        let session = Session::new("alice")
            .with_catalog("hive")
            .with_schema("web")
            .with_prepared_statement("q", prepared.spanned(Span::SYNTHETIC));
        let statement = Statement::DescribeOutput(DescribeOutput {
            name: Identifier::new("q"),
        });
        let err = analyzer_with_session(session.clone())
            .analyze(statement.clone().spanned(Span::new(0, 17)), vec![], false)
            .unwrap_err();
        assert_eq!(err.code, sqlscope_diagnostics::SQL0403);

        let prepared = select_from("orders", vec![Expr::identifier("id"), Expr::identifier("total")]);
        let session = session.with_prepared_statement("q", prepared.spanned(Span::SYNTHETIC));
        let analysis = analyzer_with_session(session)
            .analyze(statement.spanned(Span::new(0, 17)), vec![], false)
            .unwrap();
        assert_eq!(analysis.statement_kind(), Some(StatementKind::DescribeOutput));
        assert_eq!(
            analysis.describe_rows()[0],
            DescribeRow::Output {
                column_name: "id".to_string(),
                catalog: Some("hive".to_string()),
                schema: Some("web".to_string()),
                table: Some("orders".to_string()),
                data_type: SqlType::BigInt,
                type_size: Some(8),
                aliased: false,
            }
        );
        assert_eq!(analysis.output_columns().len(), 7);
    }

    #[test]
    fn test_describe_input_infers_parameter_types() {
        let prepared = Statement::from(sqlscope_ast::Query::select(
            sqlscope_ast::Select::new(vec![sqlscope_ast::SelectItem::expr(Expr::identifier("id"))])
                .from(sqlscope_ast::Relation::table("orders"))
                .filter(Expr::and(
                    Expr::eq(Expr::identifier("status"), Expr::parameter(1)),
                    Expr::gt(Expr::identifier("total"), Expr::parameter(0)),
                )),
        ));
        let session = Session::new("alice")
            .with_catalog("hive")
            .with_schema("web")
            .with_prepared_statement("q", prepared.spanned(Span::SYNTHETIC));
        let statement = Statement::DescribeInput(DescribeInput {
            name: Identifier::new("Q"),
        });
        let analysis = analyzer_with_session(session)
            .analyze(statement.spanned(Span::new(0, 16)), vec![], false)
            .unwrap();
        assert!(analysis.is_describe());
        assert_eq!(
            analysis.describe_rows(),
            &[
                DescribeRow::Input {
                    position: 0,
                    data_type: SqlType::Double
                },
                DescribeRow::Input {
                    position: 1,
                    data_type: SqlType::Varchar
                },
            ]
        );
    }

    #[test]
    fn test_describe_of_missing_statement() {
        let statement = Statement::DescribeOutput(DescribeOutput {
            name: Identifier::new("nope"),
        });
        let err = analyze_with(statement, vec![], false).unwrap_err();
        assert_eq!(err.code, SQL0100);
        assert_eq!(err.span, Span::new(0, 40));
    }
}
