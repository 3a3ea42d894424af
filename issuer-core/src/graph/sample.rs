//! Sample CSV files printed by `issuer csv-sample`

/// Sample using `meta_issue_id` / `sub_issue_id` columns
pub const META_SAMPLE: &str = r#"meta_issue_id,sub_issue_id,account_type,account_name,repo_name,project_number,title,body,project_estimate
gizmo,,organization,allthelibraries,test-repo-issues2,1,Create gizmo application,"The goal of this main issue is to create a new gizmo app.
There are multiple items we need to complete for that:",0
gizmo,a,organization,allthelibraries,test-repo-issues1,1,Design Gizmo data model,"A gizmo has two fields as follow:
- [ ] foo
- [ ] bar
",2
gizmo,b,organization,allthelibraries,test-repo-issues2,1,Create Gizmo back-end,We need to create a backend with a rest API,3
gizmo,c,organization,allthelibraries,test-repo-issues2,1,Create Gizmo front-end UI,We need to create a frontend with a web UI,4
bidule,,organization,allthelibraries,test-repo-issues1,1,Create bidule application,"The goal of this main issue is to create a new bidule app.
There are multiple items we need to complete for that:",0
bidule,d,organization,allthelibraries,test-repo-issues1,1,Design bidule data model,"A bidule has two fields as follow:
- [ ] foo
- [ ] bar
",5
bidule,e,organization,allthelibraries,test-repo-issues2,1,Create bidule back-end,We need to create a backend with a rest API,6
bidule,f,organization,allthelibraries,test-repo-issues2,1,Create bidule front-end UI,We need to create a frontend with a web UI,7
,,organization,allthelibraries,test-repo-issues2,,"Plain issue, no project",Plain,
,,organization,allthelibraries,test-repo-issues2,2,"Plain issue, in project 2",Plain 2,9
meta,,organization,allthelibraries,test-repo-issues2,2,"Meta issue, in project 2, no sub",Plain 3,10
metasub,,organization,allthelibraries,test-repo-issues2,,"Meta issue, NO project with sub",Meta plain,
metasub,subissue,organization,allthelibraries,test-repo-issues2,,"Sub issue, NO project with sub",Sub plain,
truc,,organization,allthelibraries,test-repo-issues1,,Create truc application NO project,"The goal of this main issue is to create a new truc app.
There are multiple items we need to complete for that:",
truc,d,organization,allthelibraries,test-repo-issues1,,Design truc data model NO project,"A truc has two fields as follow:
- [ ] foo
- [ ] bar
",
truc,e,organization,allthelibraries,test-repo-issues2,,Create truc back-end NO project,We need to create a backend with a rest API,
truc,f,organization,allthelibraries,test-repo-issues2,,Create truc front-end UI NO project,We need to create a frontend with a web UI,
"#;

/// Sample using `project_issue_id` / `project_parent_issue_id` columns
pub const PARENT_SAMPLE: &str = r#"project_issue_id,project_parent_issue_id,account_type,account_name,repo_name,project_number,title,body,project_estimate,status,iteration,labels
PURL,,organization,allthelibraries,test-repo-issues2,1,Package URL support,Top level epic for Package URL work,0,Todo,,epic
PURL-1,PURL,organization,allthelibraries,test-repo-issues2,1,Parse purl strings,Write a parser for purl strings,2,Todo,Iteration 1,"enhancement, parser"
PURL-2,PURL,organization,allthelibraries,test-repo-issues2,1,Build purl strings,Write a builder for purl strings,3,In Progress,Iteration 1,enhancement
PURL-2-1,PURL-2,organization,allthelibraries,test-repo-issues1,1,Escape purl qualifiers,Percent-encode qualifier values,1,Todo,Iteration 2,
,,organization,allthelibraries,test-repo-issues1,,Plain issue no project,Not tracked in any project,,,,
"#;
