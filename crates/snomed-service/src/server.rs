//! gRPC server implementation: thin translation between proto messages and
//! the `snomed-store`/`snomed-search`/`snomed-ecl-compiler` core.

use std::sync::Arc;

use snomed_ecl_compiler::{CompilationContext, EclCompiler};
use snomed_search::{DescriptionIndex, DescriptionQuery, MatchMode, MemberIndex};
use snomed_store::Store;
use snomed_types::{well_known, SctId};
use tonic::{Request, Response, Status};

use crate::config::ServerConfig;
use crate::proto::{
    concept_service_server::ConceptService, ecl_service_server::EclService,
    refset_service_server::RefsetService, search_service_server::SearchService, Concept, Description,
    EvaluateEclRequest, EvaluateEclResponse, GetChildrenRequest, GetChildrenResponse, GetConceptRequest,
    GetConceptResponse, GetMembersRequest, GetMembersResponse, GetParentsRequest, GetParentsResponse,
    IsDescendantOfRequest, IsDescendantOfResponse, SearchRequest, SearchResponse,
};

/// SNOMED CT gRPC server: one component store, one pair of search indices,
/// and a cached ECL compiler, shared read-only across every request.
#[derive(Clone)]
pub struct SnomedServer {
    store: Arc<Store>,
    descriptions: Arc<DescriptionIndex>,
    members: Arc<MemberIndex>,
    ecl: Arc<EclCompiler>,
    language_refset_ids: Arc<Vec<SctId>>,
}

impl SnomedServer {
    /// Assembles a server from its already-open collaborators.
    pub fn new(
        store: Store,
        descriptions: DescriptionIndex,
        members: MemberIndex,
        config: &ServerConfig,
    ) -> Self {
        let language_refset_ids = config
            .language_priority_tags()
            .iter()
            .flat_map(|tag| snomed_search::locale::refset_ids_for_tag(tag))
            .collect();

        Self {
            store: Arc::new(store),
            descriptions: Arc::new(descriptions),
            members: Arc::new(members),
            ecl: Arc::new(EclCompiler::new()),
            language_refset_ids: Arc::new(language_refset_ids),
        }
    }

    fn ctx(&self) -> CompilationContext<'_> {
        CompilationContext::new(&self.store, &self.descriptions, &self.members)
    }

    fn to_proto_concept(&self, id: SctId) -> Result<Option<Concept>, Status> {
        let Some(concept) = self.store.concept(id).map_err(service_status)? else {
            return Ok(None);
        };
        let fsn = self
            .store
            .preferred_description(id, well_known::FSN_TYPE, self.primary_language_refset())
            .map_err(service_status)?
            .map(|d| d.term)
            .unwrap_or_default();

        Ok(Some(Concept {
            id: concept.id,
            effective_time: concept.effective_time,
            active: concept.active,
            module_id: concept.module_id,
            definition_status_id: concept.definition_status_id,
            fsn,
        }))
    }

    fn primary_language_refset(&self) -> SctId {
        self.language_refset_ids.first().copied().unwrap_or(well_known::SNOMED_CT_CORE_MODULE)
    }

    fn ancestor_ids(&self, id: SctId) -> Result<Vec<SctId>, Status> {
        let parents = self.store.proximal_parent_ids(id).map_err(service_status)?;
        Ok(parents.into_iter().collect())
    }
}

fn service_status(error: snomed_store::StoreError) -> Status {
    crate::error::ServiceError::from(error).into()
}

#[tonic::async_trait]
impl ConceptService for SnomedServer {
    async fn get_concept(
        &self,
        request: Request<GetConceptRequest>,
    ) -> Result<Response<GetConceptResponse>, Status> {
        let id = request.into_inner().id;
        let concept = self.to_proto_concept(id)?;

        // Descriptions come straight from the store rather than the search
        // index: a single concept's descriptions are cheap to enumerate by
        // key prefix and don't need full-text ranking.
        let mut descriptions = Vec::new();
        for candidate_type in [well_known::FSN_TYPE, well_known::SYNONYM_TYPE, well_known::DEFINITION_TYPE] {
            if let Some(preferred) = self
                .store
                .preferred_description(id, candidate_type, self.primary_language_refset())
                .map_err(service_status)?
            {
                descriptions.push(Description {
                    id: preferred.id,
                    concept_id: preferred.concept_id,
                    language_code: preferred.language_code,
                    type_id: preferred.type_id,
                    term: preferred.term,
                    active: preferred.active,
                });
            }
        }

        Ok(Response::new(GetConceptResponse { concept, descriptions }))
    }

    async fn get_parents(
        &self,
        request: Request<GetParentsRequest>,
    ) -> Result<Response<GetParentsResponse>, Status> {
        let id = request.into_inner().id;
        let mut parents = Vec::new();
        for parent_id in self.ancestor_ids(id)? {
            if let Some(concept) = self.to_proto_concept(parent_id)? {
                parents.push(concept);
            }
        }
        Ok(Response::new(GetParentsResponse { parents }))
    }

    async fn get_children(
        &self,
        request: Request<GetChildrenRequest>,
    ) -> Result<Response<GetChildrenResponse>, Status> {
        let id = request.into_inner().id;
        let direct_children = self.store.raw_child_relationships(id, Some(well_known::IS_A)).map_err(service_status)?;
        let mut children = Vec::new();
        for (_dest, _type, _group, source) in direct_children {
            if let Some(concept) = self.to_proto_concept(source)? {
                children.push(concept);
            }
        }
        Ok(Response::new(GetChildrenResponse { children }))
    }

    async fn is_descendant_of(
        &self,
        request: Request<IsDescendantOfRequest>,
    ) -> Result<Response<IsDescendantOfResponse>, Status> {
        let req = request.into_inner();
        let ancestors = self.store.all_parents(req.concept_id, Some(well_known::IS_A)).map_err(service_status)?;
        Ok(Response::new(IsDescendantOfResponse { is_descendant: ancestors.contains(&req.ancestor_id) }))
    }
}

#[tonic::async_trait]
impl SearchService for SnomedServer {
    async fn search(&self, request: Request<SearchRequest>) -> Result<Response<SearchResponse>, Status> {
        let req = request.into_inner();
        let limit = if req.limit > 0 { req.limit as usize } else { 100 };

        let query = DescriptionQuery {
            term: Some((MatchMode::Contains, req.query)),
            active: if req.active_only { Some(true) } else { None },
            max_hits: Some(limit),
            ..Default::default()
        };
        let concept_ids = self.descriptions.search(&query).map_err(|e| Status::from(crate::error::ServiceError::from(e)))?;

        let mut concepts = Vec::new();
        for id in concept_ids.into_iter().take(limit) {
            if let Some(concept) = self.to_proto_concept(id)? {
                concepts.push(concept);
            }
        }
        Ok(Response::new(SearchResponse { concepts }))
    }
}

#[tonic::async_trait]
impl EclService for SnomedServer {
    async fn evaluate(
        &self,
        request: Request<EvaluateEclRequest>,
    ) -> Result<Response<EvaluateEclResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .ecl
            .compile(&req.expression, &self.ctx())
            .map_err(|e| Status::from(crate::error::ServiceError::from(e)))?;

        let total = result.len();
        let limit = if req.limit > 0 { req.limit as usize } else { usize::MAX };
        let concept_ids = result.iter().take(limit).collect();

        Ok(Response::new(EvaluateEclResponse { concept_ids, total }))
    }
}

#[tonic::async_trait]
impl RefsetService for SnomedServer {
    async fn get_members(
        &self,
        request: Request<GetMembersRequest>,
    ) -> Result<Response<GetMembersResponse>, Status> {
        let refset_id = request.into_inner().refset_id;
        let referenced_component_ids =
            self.members.members_of(refset_id).map_err(|e| Status::from(crate::error::ServiceError::from(e)))?;
        Ok(Response::new(GetMembersResponse { referenced_component_ids }))
    }
}
